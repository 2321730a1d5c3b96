pub mod auth;
pub mod brands;
pub mod catalogs;
pub mod faqs;
pub mod identities;
pub mod policies;
pub mod products;
pub mod promotions;
pub mod public;
pub mod team_members;
pub mod utils;
