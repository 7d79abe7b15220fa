//! Backend adapters and the remote execution engine.

pub mod adapter;
mod anthropic;
mod mistral;
mod openai;
mod remote;
mod sber;
pub mod templates;
pub mod tokens;
mod transport;
mod yandex;

pub use adapter::{AdapterRegistry, BackendAdapter, EnginePricing, ImageConverter, PricingTable};
pub use anthropic::AnthropicAdapter;
pub use mistral::MistralAdapter;
pub use openai::OpenAiAdapter;
pub use remote::{RemoteEngine, RetryPolicy};
pub use sber::SberAdapter;
pub use transport::{HttpTransport, Transport};
pub use yandex::YandexAdapter;
