use crate::envelope::{IntoReturn, RpcType, RpcValue, TypedValue};
use crate::router::{NO_VALUE_REASON, RouteOutcome};

use std::fmt::Display;
use std::marker::PhantomData;

/// A typed handler for an inbound invocation.
///
/// Implemented for closures `Fn(A1, .., An) -> Result<R, E>` with up to four
/// arguments, where every argument is an [`RpcValue`], `R: IntoReturn` and
/// `E: Display`. `Args` is the argument tuple and only serves to tell the
/// arities apart.
pub trait Handler<Args>: Send + Sync + 'static {
    /// Declared type names, in order. Part of the lookup key.
    fn arg_types() -> Vec<String>;

    fn call(&self, args: &[TypedValue]) -> RouteOutcome;
}

macro_rules! impl_handler {
    ($($arg:ident),*) => {
        impl<F, R, E, $($arg,)*> Handler<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> Result<R, E> + Send + Sync + 'static,
            R: IntoReturn,
            E: Display,
            $($arg: RpcValue,)*
        {
            fn arg_types() -> Vec<String> {
                vec![$(<$arg as RpcType>::type_name()),*]
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn call(&self, args: &[TypedValue]) -> RouteOutcome {
                let mut args = args.iter();
                $(
                    let Some(Ok($arg)) = args.next().map(TypedValue::decode::<$arg>) else {
                        return RouteOutcome::NotFound;
                    };
                )*

                match (self)($($arg),*) {
                    Ok(returned) => match returned.into_return() {
                        Ok(Some(value)) => RouteOutcome::Returned(value),
                        Ok(None) => RouteOutcome::Failed(NO_VALUE_REASON.to_string()),
                        Err(e) => RouteOutcome::Failed(format!("result could not be encoded: {e}")),
                    },
                    Err(e) => RouteOutcome::Failed(e.to_string()),
                }
            }
        }
    };
}

impl_handler!();
impl_handler!(A1);
impl_handler!(A1, A2);
impl_handler!(A1, A2, A3);
impl_handler!(A1, A2, A3, A4);

/// Object-safe view of a [`Handler`] with its argument tuple erased.
pub(crate) trait ErasedHandler: Send + Sync {
    fn call(&self, args: &[TypedValue]) -> RouteOutcome;
}

pub(crate) struct TypedHandler<H, Args> {
    handler: H,
    _args: PhantomData<fn() -> Args>,
}

impl<H, Args> TypedHandler<H, Args> {
    pub(crate) fn new(handler: H) -> Self {
        Self {
            handler,
            _args: PhantomData,
        }
    }
}

impl<H, Args> ErasedHandler for TypedHandler<H, Args>
where
    H: Handler<Args>,
    Args: 'static,
{
    fn call(&self, args: &[TypedValue]) -> RouteOutcome {
        self.handler.call(args)
    }
}
