// Storefront
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod delivery;
pub mod promotions;

// Accounts
pub mod customers;
pub mod otp;
pub mod staff;

// Fulfillment
pub mod kitchens;
pub mod orders;

// External services
pub mod notifications;
pub mod payments;
