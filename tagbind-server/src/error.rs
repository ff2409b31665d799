use tagbind_api::{Error as ApiError, TagId};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl Error {
    pub fn permission_denied() -> Error {
        Error::Api(ApiError::PermissionDenied)
    }

    pub fn not_found(id: &TagId) -> Error {
        Error::Api(ApiError::NotFound(id.0.clone()))
    }

    pub fn not_available(id: &TagId) -> Error {
        Error::Api(ApiError::NotAvailable(id.0.clone()))
    }

    pub fn already_claimed_by_self(id: &TagId) -> Error {
        Error::Api(ApiError::AlreadyClaimedBySelf(id.0.clone()))
    }

    pub fn conflict(id: &TagId) -> Error {
        Error::Api(ApiError::Conflict(id.0.clone()))
    }
}

impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let err = match self {
            Error::Anyhow(err) => {
                tracing::error!(?err, "internal server error");
                #[cfg(not(test))]
                let err =
                    ApiError::Unknown(String::from("Internal server error, see logs for details"));
                #[cfg(test)]
                let err = ApiError::Unknown(format!("Internal server error: {err:?}"));
                err
            }
            Error::Api(err) => {
                tracing::info!("returning error to client: {err}");
                err
            }
        };
        (err.status_code(), err.contents()).into_response()
    }
}
