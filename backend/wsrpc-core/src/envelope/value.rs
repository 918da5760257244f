//! Typed values as they travel on the wire.
//!
//! Every value is paired with a declared type name. The router keys handlers on
//! these names, so a `(value, type)` pair is the unit of the argument list and of
//! a returned result.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON value together with the type name it was declared with.
///
/// Serialized as the two-element array `[value, type]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(Value, String)", into = "(Value, String)")]
pub struct TypedValue {
    value: Value,
    type_name: String,
}

impl TypedValue {
    pub fn new(value: Value, type_name: impl Into<String>) -> Self {
        Self {
            value,
            type_name: type_name.into(),
        }
    }

    /// Encodes a Rust value, taking the type name from its [`RpcType`] impl.
    pub fn of<T: RpcType + Serialize>(value: T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            value: serde_json::to_value(&value)?,
            type_name: T::type_name(),
        })
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Decodes the value into `T`. The declared type name is not consulted.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.value)
    }
}

impl From<(Value, String)> for TypedValue {
    fn from((value, type_name): (Value, String)) -> Self {
        Self { value, type_name }
    }
}

impl From<TypedValue> for (Value, String) {
    fn from(typed: TypedValue) -> Self {
        (typed.value, typed.type_name)
    }
}

/// Names a Rust type on the wire.
pub trait RpcType {
    fn type_name() -> String;
}

/// A type that can be both sent and received as an argument or result.
pub trait RpcValue: RpcType + Serialize + DeserializeOwned {}

impl<T: RpcType + Serialize + DeserializeOwned> RpcValue for T {}

/// Converts a handler's return value into an optional result.
///
/// `None` means the handler produced no value, which callers waiting for a
/// reply treat as a failure.
pub trait IntoReturn {
    fn into_return(self) -> Result<Option<TypedValue>, serde_json::Error>;
}

macro_rules! impl_rpc_type {
    ($($rust_type:ty => $type_name:expr),* $(,)?) => {
        $(
            impl RpcType for $rust_type {
                fn type_name() -> String {
                    $type_name.to_string()
                }
            }

            impl IntoReturn for $rust_type {
                fn into_return(self) -> Result<Option<TypedValue>, serde_json::Error> {
                    TypedValue::of(self).map(Some)
                }
            }
        )*
    };
}

impl_rpc_type!(
    bool => "boolean",
    i32 => "int",
    i64 => "long",
    f32 => "float",
    f64 => "double",
    String => "string",
    Value => "json",
);

impl RpcType for &str {
    fn type_name() -> String {
        String::type_name()
    }
}

impl<T: RpcType> RpcType for Vec<T> {
    fn type_name() -> String {
        format!("{}[]", T::type_name())
    }
}

impl<T: RpcType + Serialize> IntoReturn for Vec<T> {
    fn into_return(self) -> Result<Option<TypedValue>, serde_json::Error> {
        TypedValue::of(self).map(Some)
    }
}

impl<T: RpcType + Serialize> IntoReturn for Option<T> {
    fn into_return(self) -> Result<Option<TypedValue>, serde_json::Error> {
        self.map(TypedValue::of).transpose()
    }
}

impl IntoReturn for () {
    fn into_return(self) -> Result<Option<TypedValue>, serde_json::Error> {
        Ok(None)
    }
}

/// Ordered argument list. Serialized as `[[values...], [types...]]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "(Vec<Value>, Vec<String>)",
    into = "(Vec<Value>, Vec<String>)"
)]
pub struct Arguments(Vec<TypedValue>);

impl Arguments {
    pub fn new(values: Vec<TypedValue>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[TypedValue] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn type_names(&self) -> Vec<String> {
        self.0.iter().map(|arg| arg.type_name.clone()).collect()
    }
}

impl TryFrom<(Vec<Value>, Vec<String>)> for Arguments {
    type Error = String;

    fn try_from((values, type_names): (Vec<Value>, Vec<String>)) -> Result<Self, Self::Error> {
        if values.len() != type_names.len() {
            return Err(format!(
                "argument list has {} values but {} types",
                values.len(),
                type_names.len()
            ));
        }

        Ok(Self(
            values
                .into_iter()
                .zip(type_names)
                .map(TypedValue::from)
                .collect(),
        ))
    }
}

impl From<Arguments> for (Vec<Value>, Vec<String>) {
    fn from(arguments: Arguments) -> Self {
        arguments.0.into_iter().map(<(Value, String)>::from).unzip()
    }
}

/// Anything that can be turned into an [`Arguments`] list by a caller of `invoke`.
pub trait IntoArguments {
    fn into_arguments(self) -> Result<Arguments, serde_json::Error>;
}

impl IntoArguments for Arguments {
    fn into_arguments(self) -> Result<Arguments, serde_json::Error> {
        Ok(self)
    }
}

impl IntoArguments for Vec<TypedValue> {
    fn into_arguments(self) -> Result<Arguments, serde_json::Error> {
        Ok(Arguments(self))
    }
}

impl IntoArguments for () {
    fn into_arguments(self) -> Result<Arguments, serde_json::Error> {
        Ok(Arguments::default())
    }
}

macro_rules! impl_into_arguments {
    ($($arg:ident),+) => {
        impl<$($arg),+> IntoArguments for ($($arg,)+)
        where
            $($arg: RpcType + Serialize,)+
        {
            #[allow(non_snake_case)]
            fn into_arguments(self) -> Result<Arguments, serde_json::Error> {
                let ($($arg,)+) = self;
                Ok(Arguments(vec![$(TypedValue::of($arg)?),+]))
            }
        }
    };
}

impl_into_arguments!(A1);
impl_into_arguments!(A1, A2);
impl_into_arguments!(A1, A2, A3);
impl_into_arguments!(A1, A2, A3, A4);
