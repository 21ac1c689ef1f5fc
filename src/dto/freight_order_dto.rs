use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::journey_dto::TripDetailsRequest;
use crate::models::freight_order::{NewFreightOrder, NewStopPoint, StopPointType};
use crate::utils::validation::not_blank;

#[derive(Debug, Deserialize, Validate)]
pub struct StopPointRequest {
    #[validate(range(min = 1))]
    pub sequence_order: i32,
    #[serde(rename = "type")]
    pub stop_type: StopPointType,
    #[validate(length(max = 255), custom = "not_blank")]
    pub address: String,
    pub cargo_description: Option<String>,
    pub scheduled_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateFreightOrderRequest {
    pub client_id: Uuid,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub scheduled_start_time: Option<DateTime<Utc>>,
    pub scheduled_end_time: Option<DateTime<Utc>>,
    #[validate]
    pub stop_points: Vec<StopPointRequest>,
}

impl CreateFreightOrderRequest {
    pub fn into_new(self, organization_id: Uuid) -> NewFreightOrder {
        NewFreightOrder {
            organization_id,
            client_id: self.client_id,
            description: self.description,
            scheduled_start_time: self.scheduled_start_time,
            scheduled_end_time: self.scheduled_end_time,
            stop_points: self
                .stop_points
                .into_iter()
                .map(|sp| NewStopPoint {
                    sequence_order: sp.sequence_order,
                    stop_type: sp.stop_type,
                    address: sp.address,
                    cargo_description: sp.cargo_description,
                    scheduled_time: sp.scheduled_time,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ClaimFreightOrderRequest {
    pub vehicle_id: Uuid,
}

pub type StartStopRequest = TripDetailsRequest;

#[derive(Debug, Deserialize, Validate)]
pub struct CompleteStopRequest {
    pub journey_id: Uuid,
    #[validate(range(min = 0))]
    pub end_mileage: Option<i32>,
    #[validate(range(min = 0.0))]
    pub end_engine_hours: Option<f64>,
}
