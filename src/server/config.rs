use super::RequestsLoggingLevel;
use crate::analytics::CostModel;
use crate::config::AnalyticsSettings;
use crate::search::SearchSettings;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    pub frontend_dir_path: Option<String>,
    pub analytics: AnalyticsSettings,
    pub cost_model: CostModel,
    pub search: SearchSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 3002,
            frontend_dir_path: None,
            analytics: AnalyticsSettings::default(),
            cost_model: CostModel::default(),
            search: SearchSettings::default(),
        }
    }
}
