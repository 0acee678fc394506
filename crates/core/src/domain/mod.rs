pub mod analysis;
pub mod context;
pub mod coupon;
pub mod knowledge;
pub mod product;
pub mod response;
