use std::fmt::{Display, Formatter, Result};

use serde::{Serialize, Serializer};

/// Normalized delivery error reported in a [`FailedMessage`].
///
/// Every gateway reports failures in its own vocabulary (reason strings for
/// the HTTP/2 gateway, status bytes for the binary gateway, error strings and
/// HTTP codes for the JSON gateway). The `from_*` mappers below are total:
/// anything unrecognised becomes [`ErrorKind::Other`].
///
/// [`FailedMessage`]: crate::models::flush_result::FailedMessage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    Processing,
    MissingDeviceToken,
    MissingTopic,
    MissingPayload,
    InvalidTokenSize,
    InvalidTopicSize,
    PayloadTooLarge,
    BadDeviceToken,
    Shutdown,
    BadCertificate,
    BadCertificateEnvironment,
    BadCollapseId,
    BadExpirationDate,
    BadMessageId,
    BadPath,
    BadPriority,
    BadTopic,
    DeviceTokenNotForTopic,
    DuplicateHeaders,
    ExpiredProviderToken,
    Forbidden,
    IdleTimeout,
    InternalServerError,
    InvalidProviderToken,
    MethodNotAllowed,
    MissingProviderToken,
    ServiceUnavailable,
    TooManyRequests,
    TooManyProviderTokenUpdates,
    TopicDisallowed,
    Unregistered,
    MismatchSenderId,
    InvalidDataKey,
    InvalidTtl,
    InvalidPackageName,
    UnparseableRequest,
    NotAuthenticated,
    HttpStatus(u16),
    Other,
}

impl ErrorKind {
    /// Maps the `reason` field of an HTTP/2 gateway error body.
    pub fn from_apns_reason(reason: &str) -> Self {
        match reason {
            "BadCertificate" => ErrorKind::BadCertificate,
            "BadCertificateEnvironment" => ErrorKind::BadCertificateEnvironment,
            "BadCollapseId" => ErrorKind::BadCollapseId,
            "BadDeviceToken" => ErrorKind::BadDeviceToken,
            "BadExpirationDate" => ErrorKind::BadExpirationDate,
            "BadMessageId" => ErrorKind::BadMessageId,
            "BadPath" => ErrorKind::BadPath,
            "BadPriority" => ErrorKind::BadPriority,
            "BadTopic" => ErrorKind::BadTopic,
            "DeviceTokenNotForTopic" => ErrorKind::DeviceTokenNotForTopic,
            "DuplicateHeaders" => ErrorKind::DuplicateHeaders,
            "ExpiredProviderToken" => ErrorKind::ExpiredProviderToken,
            "Forbidden" => ErrorKind::Forbidden,
            "IdleTimeout" => ErrorKind::IdleTimeout,
            "InternalServerError" => ErrorKind::InternalServerError,
            "InvalidProviderToken" => ErrorKind::InvalidProviderToken,
            "MethodNotAllowed" => ErrorKind::MethodNotAllowed,
            "MissingDeviceToken" => ErrorKind::MissingDeviceToken,
            "MissingProviderToken" => ErrorKind::MissingProviderToken,
            "MissingTopic" => ErrorKind::MissingTopic,
            "PayloadEmpty" => ErrorKind::MissingPayload,
            "PayloadTooLarge" => ErrorKind::PayloadTooLarge,
            "ServiceUnavailable" | "Unavailable" => ErrorKind::ServiceUnavailable,
            "Shutdown" => ErrorKind::Shutdown,
            "TooManyRequests" => ErrorKind::TooManyRequests,
            "TooManyProviderTokenUpdates" => ErrorKind::TooManyProviderTokenUpdates,
            "TopicDisallowed" => ErrorKind::TopicDisallowed,
            "Unregistered" => ErrorKind::Unregistered,
            _ => ErrorKind::Other,
        }
    }

    /// Maps the status byte of a binary gateway error reply.
    pub fn from_legacy_status(status: u8) -> Self {
        match status {
            1 => ErrorKind::Processing,
            2 => ErrorKind::MissingDeviceToken,
            3 => ErrorKind::MissingTopic,
            4 => ErrorKind::MissingPayload,
            5 => ErrorKind::InvalidTokenSize,
            6 => ErrorKind::InvalidTopicSize,
            7 => ErrorKind::PayloadTooLarge,
            8 => ErrorKind::BadDeviceToken,
            10 => ErrorKind::Shutdown,
            _ => ErrorKind::Other,
        }
    }

    /// Maps a per-recipient `error` string of the JSON gateway.
    pub fn from_fcm_error(error: &str) -> Self {
        match error {
            "InvalidRegistration" => ErrorKind::BadDeviceToken,
            "Unavailable" => ErrorKind::ServiceUnavailable,
            "NotRegistered" => ErrorKind::Unregistered,
            "MismatchSenderId" => ErrorKind::MismatchSenderId,
            "MissingRegistration" => ErrorKind::MissingDeviceToken,
            "MessageTooBig" => ErrorKind::PayloadTooLarge,
            "InvalidDataKey" => ErrorKind::InvalidDataKey,
            "InvalidTtl" => ErrorKind::InvalidTtl,
            "InvalidPackageName" => ErrorKind::InvalidPackageName,
            _ => ErrorKind::Other,
        }
    }

    /// Maps a non-200 HTTP status of the JSON gateway.
    pub fn from_fcm_status(status: u16) -> Self {
        match status {
            400 => ErrorKind::UnparseableRequest,
            401 => ErrorKind::NotAuthenticated,
            500..=599 => ErrorKind::InternalServerError,
            code => ErrorKind::HttpStatus(code),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Processing => "processing",
            ErrorKind::MissingDeviceToken => "missing_device_token",
            ErrorKind::MissingTopic => "missing_topic",
            ErrorKind::MissingPayload => "missing_payload",
            ErrorKind::InvalidTokenSize => "invalid_token_size",
            ErrorKind::InvalidTopicSize => "invalid_topic_size",
            ErrorKind::PayloadTooLarge => "payload_too_large",
            ErrorKind::BadDeviceToken => "bad_device_token",
            ErrorKind::Shutdown => "shutdown",
            ErrorKind::BadCertificate => "bad_certificate",
            ErrorKind::BadCertificateEnvironment => "bad_certificate_environment",
            ErrorKind::BadCollapseId => "bad_collapse_id",
            ErrorKind::BadExpirationDate => "bad_expiration_date",
            ErrorKind::BadMessageId => "bad_message_id",
            ErrorKind::BadPath => "bad_path",
            ErrorKind::BadPriority => "bad_priority",
            ErrorKind::BadTopic => "bad_topic",
            ErrorKind::DeviceTokenNotForTopic => "device_token_not_for_topic",
            ErrorKind::DuplicateHeaders => "duplicate_headers",
            ErrorKind::ExpiredProviderToken => "expired_provider_token",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::IdleTimeout => "idle_timeout",
            ErrorKind::InternalServerError => "internal_server_error",
            ErrorKind::InvalidProviderToken => "invalid_provider_token",
            ErrorKind::MethodNotAllowed => "method_not_allowed",
            ErrorKind::MissingProviderToken => "missing_provider_token",
            ErrorKind::ServiceUnavailable => "service_unavailable",
            ErrorKind::TooManyRequests => "too_many_requests",
            ErrorKind::TooManyProviderTokenUpdates => "too_many_provider_token_updates",
            ErrorKind::TopicDisallowed => "topic_disallowed",
            ErrorKind::Unregistered => "unregistered",
            ErrorKind::MismatchSenderId => "mismatch_sender_id",
            ErrorKind::InvalidDataKey => "invalid_data_key",
            ErrorKind::InvalidTtl => "invalid_ttl",
            ErrorKind::InvalidPackageName => "invalid_package_name",
            ErrorKind::UnparseableRequest => "unparseable_request",
            ErrorKind::NotAuthenticated => "not_authenticated",
            ErrorKind::HttpStatus(_) => "http_status",
            ErrorKind::Other => "other",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            ErrorKind::HttpStatus(code) => write!(f, "http_status_{}", code),
            kind => write!(f, "{}", kind.as_str()),
        }
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
