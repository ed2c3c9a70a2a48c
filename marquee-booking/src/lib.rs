pub mod error;
pub mod hold;
pub mod inbox;
pub mod manager;
pub mod memory;
pub mod orchestrator;
pub mod refund;
pub mod resiliency;
pub mod sweeper;
pub mod view;
pub mod webhook;

pub use error::BookingError;
pub use hold::HoldManager;
pub use inbox::{Delivery, WebhookInbox};
pub use manager::{BookingManager, CancellationReceipt, CreatedBooking, NewBooking, TransitionOutcome};
pub use orchestrator::{CheckoutSettings, MockPaymentGateway, PaymentOrchestrator};
pub use sweeper::{SweepReport, Sweeper};
pub use view::BookingView;
pub use webhook::{GatewayEvent, WebhookEnvelope, WebhookVerifier};
