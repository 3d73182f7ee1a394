// Uniform operation envelope shared by every connector

use crate::error::{ErrorCode, StashDbError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Pagination metadata attached to list results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}

/// The result of every connector operation. Failures are values, never panics
/// or errors thrown across the store boundary.
///
/// Serializes as `{"success": true, "data": .., "meta"?: .., "message"?: ..}` or
/// `{"success": false, "message": .., "error": {"code": ..}}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Response<T> {
    Success {
        data: T,
        meta: Option<PageMeta>,
        message: Option<String>,
    },
    Failure {
        message: String,
        code: ErrorCode,
    },
}

impl<T> Response<T> {
    pub fn ok(data: T) -> Self {
        Response::Success {
            data,
            meta: None,
            message: None,
        }
    }

    pub fn page(data: T, meta: PageMeta) -> Self {
        Response::Success {
            data,
            meta: Some(meta),
            message: None,
        }
    }

    pub fn fail(code: ErrorCode, message: impl Into<String>) -> Self {
        Response::Failure {
            message: message.into(),
            code,
        }
    }

    pub fn with_message(self, text: impl Into<String>) -> Self {
        match self {
            Response::Success { data, meta, .. } => Response::Success {
                data,
                meta,
                message: Some(text.into()),
            },
            failure => failure,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Response::Success { data, .. } => Some(data),
            Response::Failure { .. } => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Response::Success { data, .. } => Some(data),
            Response::Failure { .. } => None,
        }
    }

    pub fn meta(&self) -> Option<&PageMeta> {
        match self {
            Response::Success { meta, .. } => meta.as_ref(),
            Response::Failure { .. } => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Response::Success { message, .. } => message.as_deref(),
            Response::Failure { message, .. } => Some(message),
        }
    }

    /// The failure code, if this is a failure.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Response::Success { .. } => None,
            Response::Failure { code, .. } => Some(*code),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Response<U> {
        match self {
            Response::Success {
                data,
                meta,
                message,
            } => Response::Success {
                data: f(data),
                meta,
                message,
            },
            Response::Failure { message, code } => Response::Failure { message, code },
        }
    }
}

impl<T> From<StashDbError> for Response<T> {
    fn from(e: StashDbError) -> Self {
        Response::fail(e.code(), e.to_string())
    }
}

impl<T> From<crate::error::Result<T>> for Response<T> {
    fn from(result: crate::error::Result<T>) -> Self {
        match result {
            Ok(data) => Response::ok(data),
            Err(e) => e.into(),
        }
    }
}

impl Response<serde_json::Value> {
    /// Decode the payload into a concrete type. A payload that does not fit
    /// `U` becomes an `INVALID_REQUEST` failure.
    pub fn into_typed<U: DeserializeOwned>(self) -> Response<U> {
        match self {
            Response::Success {
                data,
                meta,
                message,
            } => match serde_json::from_value(data) {
                Ok(data) => Response::Success {
                    data,
                    meta,
                    message,
                },
                Err(e) => Response::fail(ErrorCode::InvalidRequest, e.to_string()),
            },
            Response::Failure { message, code } => Response::Failure { message, code },
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ErrorBody {
    code: ErrorCode,
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    meta: Option<PageMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
}

impl<T: Serialize> Serialize for Response<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let envelope = match self {
            Response::Success {
                data,
                meta,
                message,
            } => Envelope {
                success: true,
                data: Some(data),
                meta: *meta,
                message: message.clone(),
                error: None,
            },
            Response::Failure { message, code } => Envelope {
                success: false,
                data: None,
                meta: None,
                message: Some(message.clone()),
                error: Some(ErrorBody { code: *code }),
            },
        };
        envelope.serialize(serializer)
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Response<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let envelope = Envelope::<T>::deserialize(deserializer)?;
        if envelope.success {
            let data = match envelope.data {
                Some(data) => data,
                None => serde_json::from_value(serde_json::Value::Null)
                    .map_err(|_| serde::de::Error::missing_field("data"))?,
            };
            Ok(Response::Success {
                data,
                meta: envelope.meta,
                message: envelope.message,
            })
        } else {
            Ok(Response::Failure {
                message: envelope.message.unwrap_or_default(),
                code: envelope
                    .error
                    .map(|e| e.code)
                    .unwrap_or(ErrorCode::StorageError),
            })
        }
    }
}
