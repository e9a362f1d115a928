//! Classification of TLS handshake and certificate failures
//!
//! reqwest reports TLS problems as connect errors whose source chain carries
//! the TLS library's own text. [`TlsFailure::detect`] turns that chain into a
//! value; [`TlsFailure::into_error`] renders the remediation for the user.

use crate::error::Error;

const INSECURE_HINT: &str = "You may disable certificate checks by setting `insecure = true` in the client \
     configuration (or BROKER_INSECURE=1). Doing so means your data is potentially visible to third parties.";

/// Which part of the TLS negotiation failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsFailure {
    /// The peer certificate is its own issuer
    SelfSigned,
    /// The certificate chain does not lead to a trusted root we have locally
    MissingLocalIssuer,
    /// Any other verification failure (expired, wrong name, bad signature)
    VerifyFailed,
    /// The server refused the protocol version we offered
    VersionRejected,
    /// Handshake failed for a reason we do not recognise
    Other(String),
}

impl TlsFailure {
    /// Inspect a rendered error chain; `None` when the failure is not TLS related
    pub fn detect(chain: &str) -> Option<TlsFailure> {
        let lower = chain.to_ascii_lowercase();

        if lower.contains("self signed") || lower.contains("self-signed") || lower.contains("selfsigned") {
            return Some(TlsFailure::SelfSigned);
        }
        if lower.contains("unable to get local issuer certificate") || lower.contains("unknownissuer") {
            return Some(TlsFailure::MissingLocalIssuer);
        }
        if lower.contains("certificate verify failed") || lower.contains("invalid peer certificate") {
            return Some(TlsFailure::VerifyFailed);
        }
        if lower.contains("wrong version number")
            || lower.contains("alert protocol version")
            || lower.contains("protocolversion")
        {
            return Some(TlsFailure::VersionRejected);
        }
        if lower.contains("tls") || lower.contains("ssl") || lower.contains("handshake") || lower.contains("certificate") {
            return Some(TlsFailure::Other(chain.to_string()));
        }
        None
    }

    /// User-facing error for this failure against `server`
    pub fn into_error(self, server: &str) -> Error {
        match self {
            TlsFailure::SelfSigned => Error::SelfSignedCertificate {
                message: format!(
                    "The server is using a self-signed certificate, which means that a secure connection \
                     can't be established to '{}'.\n\n{}",
                    server, INSECURE_HINT
                ),
            },
            TlsFailure::MissingLocalIssuer => Error::CertificateVerificationFailed {
                message: format!(
                    "The server's certificate could not be verified, which means that a secure connection \
                     can't be established to the server '{}'.\n\nThe certificate authority that signed it \
                     is not in the local trust store. Set `ca_file` in the client configuration to the \
                     PEM file of your system or organisation CA.",
                    server
                ),
            },
            TlsFailure::VerifyFailed => Error::CertificateVerificationFailed {
                message: format!(
                    "The server's certificate could not be verified, which means that a secure connection \
                     can't be established to the server '{}'.\n\nIf your server is using a self-signed \
                     certificate, {}",
                    server,
                    lowercase_first(INSECURE_HINT)
                ),
            },
            TlsFailure::VersionRejected => Error::SslVersionRejected {
                message: format!(
                    "The server '{}' has rejected your connection attempt because this client offered a \
                     TLS protocol version the server does not accept. Check the server's TLS settings or \
                     contact your administrator.",
                    server
                ),
            },
            TlsFailure::Other(detail) => Error::SslConnectionFailed {
                message: format!(
                    "A secure connection could not be established to the server '{}' ({}).\n\n{}",
                    server, detail, INSECURE_HINT
                ),
            },
        }
    }
}

fn lowercase_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_detect_known_failures() {
        assert_eq!(
            TlsFailure::detect("error:1416F086:SSL routines: certificate verify failed (self signed certificate)"),
            Some(TlsFailure::SelfSigned)
        );
        assert_eq!(
            TlsFailure::detect("certificate verify failed: unable to get local issuer certificate"),
            Some(TlsFailure::MissingLocalIssuer)
        );
        assert_eq!(
            TlsFailure::detect("invalid peer certificate: UnknownIssuer"),
            Some(TlsFailure::MissingLocalIssuer)
        );
        assert_eq!(
            TlsFailure::detect("invalid peer certificate: Expired"),
            Some(TlsFailure::VerifyFailed)
        );
        assert_eq!(
            TlsFailure::detect("SSL_connect returned=1 errno=0 state=error: wrong version number"),
            Some(TlsFailure::VersionRejected)
        );
        assert_eq!(
            TlsFailure::detect("sslv3 tlsv1 alert protocol version"),
            Some(TlsFailure::VersionRejected)
        );
        assert!(matches!(
            TlsFailure::detect("received fatal alert: HandshakeFailure"),
            Some(TlsFailure::Other(_))
        ));
    }

    #[test]
    fn test_non_tls_chain() {
        assert_eq!(TlsFailure::detect("tcp connect error: Connection refused (os error 111)"), None);
    }

    #[test]
    fn test_error_kinds() {
        let server = "https://broker.example.com";
        assert_eq!(TlsFailure::SelfSigned.into_error(server).kind(), ErrorKind::SelfSignedCertificate);
        assert_eq!(
            TlsFailure::MissingLocalIssuer.into_error(server).kind(),
            ErrorKind::CertificateVerificationFailed
        );
        assert_eq!(TlsFailure::VersionRejected.into_error(server).kind(), ErrorKind::SslVersionRejected);

        let err = TlsFailure::Other("bad record mac".to_string()).into_error(server);
        assert_eq!(err.kind(), ErrorKind::SslConnectionFailed);
        assert!(err.to_string().contains("bad record mac"));
    }

    #[test]
    fn test_self_signed_mentions_insecure() {
        let message = TlsFailure::SelfSigned.into_error("https://broker.example.com").to_string();
        assert!(message.contains("insecure = true"));
        assert!(message.contains("broker.example.com"));
    }
}
