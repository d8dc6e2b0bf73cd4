pub mod mailer;
pub mod provisioning;
pub mod regions;

pub use mailer::{EmailMessage, HttpMailer, LogMailer, Mailer};
pub use provisioning::{
    OffboardingReport, OnboardingReport, ProvisioningError, ProvisioningOrchestrator, ProvisioningSettings,
    ProvisioningStage, PublishReport, RepublishReport, ResourceError,
};
pub use regions::RegionService;
