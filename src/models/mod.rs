pub mod booking;
pub mod movie;
pub mod payment_order;
pub mod seat;
pub mod show;
pub mod theater;

pub use booking::{Booking, NewBooking};
pub use movie::Movie;
pub use payment_order::{NewPaymentOrder, OrderStatus, PaymentOrder};
pub use seat::Seat;
pub use show::{Show, ShowSummary};
pub use theater::Theater;
