//! Image probing and derivative production.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **Zoom-crop → WebP** | `resize_to_fill` + `webp` encoder |
//! | **Zoom-crop → source format** | `resize_to_fill` + `image` JPEG/PNG encoders |
//!
//! The module is split into:
//! - **Parameters**: Data structures describing derivatives to produce
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
pub mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use params::{DerivativeFormat, DerivativeParams, Quality, VariantDescriptor};
pub use rust_backend::RustBackend;
