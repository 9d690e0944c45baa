use axum::{
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::{
    errors::{AuthFailure, Outcome, ServiceResult},
    files::StoredFile,
};

pub(crate) mod auth;
pub(crate) mod channels;
pub(crate) mod communities;
pub(crate) mod friends;
pub(crate) mod messages;
pub(crate) mod roles;
pub(crate) mod users;

pub(crate) use auth::*;
pub(crate) use channels::*;
pub(crate) use communities::*;
pub(crate) use friends::*;
pub(crate) use messages::*;
pub(crate) use roles::*;
pub(crate) use users::*;

/// Parses a path or payload identifier; malformed input never reaches a service.
pub(crate) fn parse_id<T>(raw: String) -> Result<T, AuthFailure>
where
    T: TryFrom<String>,
{
    T::try_from(raw).map_err(|_| AuthFailure::InvalidRequest)
}

pub(crate) fn decode_upload(encoded: Option<String>) -> Result<Option<Vec<u8>>, AuthFailure> {
    encoded
        .map(|value| {
            STANDARD
                .decode(value.trim())
                .map_err(|_| AuthFailure::InvalidRequest)
        })
        .transpose()
}

pub(crate) fn file_response(event: &'static str, result: ServiceResult<StoredFile>) -> Response {
    match result {
        Ok(file) => ([(CONTENT_TYPE, file.mime_type)], file.bytes).into_response(),
        Err(error) => Outcome::<()>::settle(event, "", Err(error)).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use agora_core::UserId;

    use super::{decode_upload, parse_id};

    #[test]
    fn ids_and_uploads_are_validated_at_the_boundary() {
        let id = UserId::new();
        assert_eq!(parse_id::<UserId>(id.to_string()).ok(), Some(id));
        assert!(parse_id::<UserId>("not-a-ulid".to_owned()).is_err());

        assert_eq!(decode_upload(None).ok(), Some(None));
        assert_eq!(
            decode_upload(Some("aGk=".to_owned())).ok(),
            Some(Some(b"hi".to_vec()))
        );
        assert!(decode_upload(Some("%%%".to_owned())).is_err());
    }
}
