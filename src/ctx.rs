//! Short form for attaching context to errors while converting them
//! into `anyhow::Error`.
//!
//! `.map_err(ctx!("normalizing column {name:?}"))` instead of
//! `.map_err(anyhow::Error::from).with_context(|| anyhow!("normalizing column {name:?}"))`.

#[macro_export]
macro_rules! ctx {
    ($($arg:tt)*) => {
        |e| anyhow::Error::from(e).context(format!($($arg)*))
    };
}
