pub mod bag_service;
pub mod checkout;
pub mod orders;
pub mod pricing;
pub mod profiles;
pub mod webhooks;
