use serde::{Deserialize, Serialize};

use crate::models::dashboard::DashboardPeriod;

#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    #[serde(default)]
    pub period: DashboardPeriod,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub unread: i64,
}
