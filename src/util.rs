use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A boxed future as used by the `Handler`, `Validator` and `AuthCheck`
/// traits.
pub struct PinnedFuture<'a, O> {
	inner: Pin<Box<dyn Future<Output = O> + Send + 'a>>,
}

impl<'a, O> PinnedFuture<'a, O> {
	pub fn new<F>(future: F) -> Self
	where
		F: Future<Output = O> + Send + 'a,
	{
		Self {
			inner: Box::pin(future),
		}
	}

	/// Creates a `PinnedFuture` which is immediately ready with `value`.
	pub fn ready(value: O) -> Self
	where
		O: Send + 'a,
	{
		Self::new(async move { value })
	}
}

impl<O> Future for PinnedFuture<'_, O> {
	type Output = O;

	fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
		self.get_mut().inner.as_mut().poll(cx)
	}
}
