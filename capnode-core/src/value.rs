use crate::error::RpcError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Number;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// An exposable async callable.
///
/// Functions are invoked without a receiver: any state a function needs must
/// be captured in its closure or passed as arguments.
#[async_trait]
pub trait ApiFunction: Send + Sync {
    async fn call(&self, args: Vec<ApiValue>) -> Result<ApiValue, RpcError>;
}

/// In-memory value tree an application exposes or receives.
///
/// The model is deliberately narrow: strings, numbers, keyed objects, arrays,
/// and async functions. Booleans and null have no representation here, and
/// their wire spellings are rejected at decode time.
#[derive(Clone)]
pub enum ApiValue {
    String(String),
    Number(Number),
    Object(BTreeMap<String, ApiValue>),
    Array(Vec<ApiValue>),
    Function(Arc<dyn ApiFunction>),
}

impl ApiValue {
    pub fn string(value: impl Into<String>) -> Self {
        ApiValue::String(value.into())
    }

    pub fn number(value: impl Into<Number>) -> Self {
        ApiValue::Number(value.into())
    }

    /// A floating-point number. `None` for NaN and infinities, which JSON
    /// cannot carry.
    pub fn float(value: f64) -> Option<Self> {
        Number::from_f64(value).map(ApiValue::Number)
    }

    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ApiValue)>,
    {
        ApiValue::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn array(items: impl IntoIterator<Item = ApiValue>) -> Self {
        ApiValue::Array(items.into_iter().collect())
    }

    /// Wrap an async closure as a function leaf.
    pub fn function<F, Fut>(f: F) -> Self
    where
        F: Fn(Vec<ApiValue>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ApiValue, RpcError>> + Send + 'static,
    {
        let boxed = move |args: Vec<ApiValue>| -> BoxFuture<'static, Result<ApiValue, RpcError>> {
            Box::pin(f(args))
        };
        ApiValue::Function(Arc::new(NativeFunction(boxed)))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ApiValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            ApiValue::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_number().and_then(Number::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_number().and_then(Number::as_f64)
    }

    /// Look up a key of an object value.
    pub fn get(&self, key: &str) -> Option<&ApiValue> {
        match self {
            ApiValue::Object(entries) => entries.get(key),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<Arc<dyn ApiFunction>> {
        match self {
            ApiValue::Function(f) => Some(f.clone()),
            _ => None,
        }
    }

    /// Call this value if it is a function leaf.
    pub async fn invoke(&self, args: Vec<ApiValue>) -> Result<ApiValue, RpcError> {
        match self {
            ApiValue::Function(f) => f.call(args).await,
            _ => Err(RpcError::NotCallable),
        }
    }
}

/// Adapter turning a boxed-future closure into an [`ApiFunction`].
struct NativeFunction<F>(F);

#[async_trait]
impl<F> ApiFunction for NativeFunction<F>
where
    F: Fn(Vec<ApiValue>) -> BoxFuture<'static, Result<ApiValue, RpcError>> + Send + Sync,
{
    async fn call(&self, args: Vec<ApiValue>) -> Result<ApiValue, RpcError> {
        (self.0)(args).await
    }
}

impl fmt::Debug for ApiValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiValue::String(s) => f.debug_tuple("String").field(s).finish(),
            ApiValue::Number(n) => f.debug_tuple("Number").field(n).finish(),
            ApiValue::Object(entries) => f.debug_tuple("Object").field(entries).finish(),
            ApiValue::Array(items) => f.debug_tuple("Array").field(items).finish(),
            ApiValue::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// Structural equality; function leaves compare by identity.
impl PartialEq for ApiValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ApiValue::String(a), ApiValue::String(b)) => a == b,
            (ApiValue::Number(a), ApiValue::Number(b)) => a == b,
            (ApiValue::Object(a), ApiValue::Object(b)) => a == b,
            (ApiValue::Array(a), ApiValue::Array(b)) => a == b,
            (ApiValue::Function(a), ApiValue::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for ApiValue {
    fn from(value: &str) -> Self {
        ApiValue::String(value.to_string())
    }
}

impl From<String> for ApiValue {
    fn from(value: String) -> Self {
        ApiValue::String(value)
    }
}

impl From<i64> for ApiValue {
    fn from(value: i64) -> Self {
        ApiValue::Number(Number::from(value))
    }
}

impl From<u64> for ApiValue {
    fn from(value: u64) -> Self {
        ApiValue::Number(Number::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closure_functions_are_callable() {
        let double = ApiValue::function(|args: Vec<ApiValue>| async move {
            let n = args[0].as_i64().unwrap_or(0);
            Ok(ApiValue::from(n * 2))
        });

        let result = double.invoke(vec![ApiValue::from(21i64)]).await.unwrap();
        assert_eq!(result.as_i64(), Some(42));
    }

    #[tokio::test]
    async fn invoking_a_non_function_fails() {
        let value = ApiValue::from("bam");
        assert_eq!(
            value.invoke(vec![]).await.unwrap_err(),
            RpcError::NotCallable
        );
    }

    #[test]
    fn structural_equality_ignores_object_entry_order() {
        let a = ApiValue::object([("x", ApiValue::from(1i64)), ("y", ApiValue::from(2i64))]);
        let b = ApiValue::object([("y", ApiValue::from(2i64)), ("x", ApiValue::from(1i64))]);
        assert_eq!(a, b);
    }

    #[test]
    fn functions_compare_by_identity() {
        let f = ApiValue::function(|_| async { Ok(ApiValue::from("ok")) });
        let g = ApiValue::function(|_| async { Ok(ApiValue::from("ok")) });
        assert_eq!(f, f.clone());
        assert_ne!(f, g);
    }

    #[test]
    fn float_rejects_nan() {
        assert!(ApiValue::float(f64::NAN).is_none());
        assert!(ApiValue::float(2.5).is_some());
    }
}
