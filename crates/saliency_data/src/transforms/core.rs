use anyhow::{Context, Result};
use rand::Rng;
use std::marker::PhantomData;

/// Core `Transform` trait for composable preprocessing pipelines.
///
/// A `Transform<I, O>` is a deterministic, stateless conversion of an owned
/// `I` into a freshly owned `O`. Steps chain with `.then(...)` into a single
/// statically dispatched pipeline.
///
/// A type may implement the trait for several input types (e.g. an image
/// `Tensor` and a full `SalientSample`); the argument type picks the impl.
///
/// Note: `then()` works only when:
/// 1. **Types align**: `self: Transform<I, O>`, `next: Transform<O, M>`
/// 2. **Owned**: `Self: Sized` (no trait objects)
/// 3. **Thread-safe**: intermediate and output types must be `Send`
pub trait Transform<I, O>: Send + Sync {
    /// Applies the transformation to the input
    fn apply(&self, input: I) -> Result<O>;

    #[inline]
    fn then<T, M>(self, next: T) -> Chain<Self, T, O>
    where
        Self: Sized,
        T: Transform<O, M>,
        O: Send,
        M: Send,
    {
        Chain::new(self, next)
    }
}

/// A transform that draws from a caller-supplied random generator.
///
/// Random stages never reach for global state: the generator is passed in
/// on every call, so a pipeline is reproducible under a fixed seed and safe
/// to run on independently seeded workers.
pub trait RandomTransform<I, O>: Send + Sync {
    fn apply_with<R: Rng + ?Sized>(&self, input: I, rng: &mut R) -> Result<O>;
}

/// Two transforms run back to back (`A` -> `B`).
/// `PhantomData<M>` pins the intermediate type.
#[derive(Debug)]
pub struct Chain<A, B, M> {
    first: A,
    second: B,
    _marker: PhantomData<fn() -> M>,
}

impl<A, B, M> Chain<A, B, M> {
    /// Creates a new transform chain. Prefer [`Transform::then`] when the
    /// first stage implements `Transform` for a single input type; use this
    /// when it does not, and let the field type fix `M`.
    pub fn new(first: A, second: B) -> Self {
        Self {
            first,
            second,
            _marker: PhantomData,
        }
    }
}

impl<I, M, O, A, B> Transform<I, O> for Chain<A, B, M>
where
    A: Transform<I, M>,
    B: Transform<M, O>,
    M: Send,
{
    fn apply(&self, input: I) -> Result<O> {
        self.first
            .apply(input)
            .and_then(|mid| self.second.apply(mid))
            .with_context(|| {
                format!(
                    "Transform chain failed: {} → {} → {}",
                    std::any::type_name::<A>(),
                    std::any::type_name::<B>(),
                    std::any::type_name::<O>()
                )
            })
    }
}
