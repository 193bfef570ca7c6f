use crate::ShowcaseService;
use crate::pb::{Insights, InsightsRequest, Profile, ProfileRequest, Report, ReportRequest};
use tonic::{Request, Response, Status};

/// Returns canned data for every method. Authorization is not its concern:
/// by the time a request reaches it the tier check has already passed.
#[derive(Debug, Clone, Default)]
pub struct ShowcaseServiceImpl;

#[tonic::async_trait]
impl ShowcaseService for ShowcaseServiceImpl {
    async fn get_public_profile(
        &self,
        request: Request<ProfileRequest>,
    ) -> Result<Response<Profile>, Status> {
        let user_id = request.into_inner().user_id;

        if user_id.is_empty() {
            return Err(Status::invalid_argument("user_id must not be empty"));
        }

        Ok(Response::new(Profile {
            display_name: format!("user {user_id}"),
            user_id,
        }))
    }

    async fn get_standard_report(
        &self,
        request: Request<ReportRequest>,
    ) -> Result<Response<Report>, Status> {
        let period = request.into_inner().period;

        Ok(Response::new(Report {
            total_requests: 42 * period.len() as u32,
            period,
        }))
    }

    async fn get_premium_insights(
        &self,
        request: Request<InsightsRequest>,
    ) -> Result<Response<Insights>, Status> {
        let topic = request.into_inner().topic;

        Ok(Response::new(Insights {
            highlights: vec![
                format!("{topic}: traffic is up"),
                format!("{topic}: latency is down"),
            ],
            topic,
        }))
    }
}
