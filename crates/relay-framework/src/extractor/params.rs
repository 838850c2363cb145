use std::str::FromStr;

use super::FromContext;
use crate::context::Request;
use crate::error::{ExtractError, ExtractResult};
use crate::routing::RouteParams;

/// Captured parameters parsed positionally.
///
/// ```rust,ignore
/// // "transfer {amount} {to}"
/// async fn transfer(Path((amount, to)): Path<(u64, String)>) { /* .. */ }
/// ```
///
/// Wrap a trailing element in `Option` for optional parameters. A route
/// with one parameter can use `Path<T>` directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path<T>(pub T);

/// Types that can be built from [`RouteParams`] in capture order.
pub trait FromParams: Sized {
    fn from_params(params: &RouteParams) -> ExtractResult<Self>;
}

/// One positional element of a [`Path`] tuple.
pub trait PathValue: Sized {
    fn from_param(name: &str, value: Option<&str>) -> ExtractResult<Self>;
}

fn parse<T: FromStr>(name: &str, value: &str) -> ExtractResult<T>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ExtractError::InvalidParam {
        param: name.to_string(),
        reason: e.to_string(),
    })
}

/// A single value from the first captured parameter.
fn first<T: PathValue>(params: &RouteParams) -> ExtractResult<T> {
    match params.iter().next() {
        Some((name, value)) => T::from_param(name, value),
        None => T::from_param("?", None),
    }
}

macro_rules! impl_path_value {
    ($($ty:ty),*) => {
        $(
            impl PathValue for $ty {
                fn from_param(name: &str, value: Option<&str>) -> ExtractResult<Self> {
                    let value = value.ok_or_else(|| ExtractError::MissingParam(name.to_string()))?;
                    parse(name, value)
                }
            }

            impl PathValue for Option<$ty> {
                fn from_param(name: &str, value: Option<&str>) -> ExtractResult<Self> {
                    value.map(|v| parse(name, v)).transpose()
                }
            }

            impl FromParams for $ty {
                fn from_params(params: &RouteParams) -> ExtractResult<Self> {
                    first(params)
                }
            }

            impl FromParams for Option<$ty> {
                fn from_params(params: &RouteParams) -> ExtractResult<Self> {
                    first(params)
                }
            }
        )*
    };
}

impl_path_value!(
    String, bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64
);

macro_rules! impl_from_params {
    ($($ty:ident),+) => {
        #[allow(non_snake_case)]
        impl<$($ty: PathValue,)+> FromParams for ($($ty,)+) {
            fn from_params(params: &RouteParams) -> ExtractResult<Self> {
                let mut iter = params.iter();
                $(
                    let $ty = match iter.next() {
                        Some((name, value)) => $ty::from_param(name, value)?,
                        None => $ty::from_param("?", None)?,
                    };
                )+
                Ok(($($ty,)+))
            }
        }
    };
}

impl_from_params!(T1);
impl_from_params!(T1, T2);
impl_from_params!(T1, T2, T3);
impl_from_params!(T1, T2, T3, T4);
impl_from_params!(T1, T2, T3, T4, T5);
impl_from_params!(T1, T2, T3, T4, T5, T6);

impl<T: FromParams> FromContext for Path<T> {
    fn from_context(req: &Request) -> ExtractResult<Self> {
        T::from_params(req.params()).map(Path)
    }
}
