pub mod order;
pub mod voucher;
