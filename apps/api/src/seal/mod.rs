// Seal lifecycle: POST /api/seal creates the unsealed artifact and opens a
// checkout; POST /api/webhook applies the provider's completion event.

pub mod handlers;
pub mod webhook;
