pub mod booking;
pub mod pricing;
pub mod reconcile;

pub use booking::BookingService;
pub use reconcile::Reconciler;
