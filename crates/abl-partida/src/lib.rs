//! ABL partida: resolves cadastral tax records ("partidas") for a coordinate
//! by rendering the municipal registry page in headless Chromium and reading
//! the JSON payload out of its body.

pub mod compose;
pub mod error;
pub mod fetcher;
pub mod renderer;
pub mod resolver;
pub mod types;

pub use compose::{Branding, ComposedMessage, NotificationComposer};
pub use error::{FetchError, Result};
pub use fetcher::{PageFetcher, DEFAULT_NAVIGATION_TIMEOUT};
pub use renderer::chromium::{ChromiumRenderer, LaunchOptions};
pub use renderer::{RenderContext, Renderer};
pub use resolver::{RecordResolver, DEFAULT_BASE_URL};
pub use types::*;
