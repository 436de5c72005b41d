use std::sync::Arc;

use vix_service::VixService;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<VixService>,
}
impl AppState {
	pub async fn new(config: vix_config::Config) -> color_eyre::Result<Self> {
		let service = VixService::connect(config).await?;

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: VixService) -> Self {
		Self { service: Arc::new(service) }
	}
}
