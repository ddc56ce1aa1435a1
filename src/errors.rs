//! POSIX-flavored error type shared by every node, handle, and client trait in this crate.
//!
//! Every fallible operation in the node tree and the mutable write path returns
//! `FuseResult<T> = Result<T, PosixError>`. The service loop is the only place that converts
//! a `PosixError` into the raw `c_int` the kernel expects.

use std::fmt::{Debug, Display};

pub type FuseResult<T> = Result<T, PosixError>;

/// A POSIX error: an errno-compatible code plus a human-readable message for logs.
#[derive(Clone, PartialEq, Eq)]
pub struct PosixError {
    code: i32,
    pub msg: String,
}

impl PosixError {
    pub fn new<T, U>(code: T, msg: U) -> Self
    where
        T: Into<i32>,
        U: ToString,
    {
        Self {
            code: code.into(),
            msg: msg.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::from(self.code)
    }

    pub fn raw_error(&self) -> i32 {
        self.code
    }

    pub fn not_found<U: ToString>(msg: U) -> Self {
        ErrorKind::FileNotFound.to_error(msg)
    }

    pub fn permission_denied<U: ToString>(msg: U) -> Self {
        ErrorKind::PermissionDenied.to_error(msg)
    }

    pub fn invalid<U: ToString>(msg: U) -> Self {
        ErrorKind::InvalidArgument.to_error(msg)
    }

    pub fn transport<U: ToString>(msg: U) -> Self {
        ErrorKind::InputOutputError.to_error(msg)
    }

    pub fn stale<U: ToString>(msg: U) -> Self {
        ErrorKind::StaleFileHandle.to_error(msg)
    }

    pub fn unsupported<U: ToString>(msg: U) -> Self {
        ErrorKind::FunctionNotImplemented.to_error(msg)
    }

    pub fn not_supported<U: ToString>(msg: U) -> Self {
        ErrorKind::NotSupported.to_error(msg)
    }

    pub fn range<U: ToString>(msg: U) -> Self {
        ErrorKind::ResultTooLarge.to_error(msg)
    }

    /// The "attribute does not exist" errno, which differs by platform.
    pub fn no_xattr<U: ToString>(msg: U) -> Self {
        #[cfg(target_os = "macos")]
        {
            PosixError::new(libc::ENOATTR, msg)
        }
        #[cfg(not(target_os = "macos"))]
        {
            ErrorKind::NoDataAvailable.to_error(msg)
        }
    }
}

impl From<std::io::Error> for PosixError {
    fn from(e: std::io::Error) -> Self {
        PosixError::new(e.raw_os_error().unwrap_or(libc::EIO), e.to_string())
    }
}

impl Debug for PosixError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PosixError")
            .field("code", &self.code)
            .field("kind", &ErrorKind::from(self.code))
            .field("msg", &self.msg)
            .finish()
    }
}

impl Display for PosixError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = ErrorKind::from(self.code);
        match self.msg.as_str() {
            "" => write!(f, "{:?} (code {})", kind, self.code),
            _ => write!(f, "{:?} (code {}): {}", kind, self.code, self.msg),
        }
    }
}

impl std::error::Error for PosixError {}

/// A coarse, language-independent taxonomy mapped onto concrete errno values.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ErrorKind {
    PermissionDenied,
    FileNotFound,
    InterruptedSystemCall,
    InputOutputError,
    BadFileDescriptor,
    FileExists,
    NotADirectory,
    IsADirectory,
    InvalidArgument,
    NoSpaceLeftOnDevice,
    ReadOnlyFileSystem,
    ResultTooLarge,
    ResourceUnavailableTryAgain,
    DirectoryNotEmpty,
    StaleFileHandle,
    FunctionNotImplemented,
    NotSupported,
    NoDataAvailable,
    Unknown(i32),
}

impl ErrorKind {
    pub fn to_error<T: ToString>(self, msg: T) -> PosixError {
        PosixError::new(i32::from(self), msg)
    }
}

impl From<i32> for ErrorKind {
    fn from(code: i32) -> Self {
        match code {
            libc::EPERM => Self::PermissionDenied,
            libc::ENOENT => Self::FileNotFound,
            libc::EINTR => Self::InterruptedSystemCall,
            libc::EIO => Self::InputOutputError,
            libc::EBADF => Self::BadFileDescriptor,
            libc::EEXIST => Self::FileExists,
            libc::ENOTDIR => Self::NotADirectory,
            libc::EISDIR => Self::IsADirectory,
            libc::EINVAL => Self::InvalidArgument,
            libc::ENOSPC => Self::NoSpaceLeftOnDevice,
            libc::EROFS => Self::ReadOnlyFileSystem,
            libc::ERANGE => Self::ResultTooLarge,
            libc::EAGAIN => Self::ResourceUnavailableTryAgain,
            libc::ENOTEMPTY => Self::DirectoryNotEmpty,
            libc::ESTALE => Self::StaleFileHandle,
            libc::ENOSYS => Self::FunctionNotImplemented,
            libc::ENOTSUP => Self::NotSupported,
            libc::ENODATA => Self::NoDataAvailable,
            _ => Self::Unknown(code),
        }
    }
}

impl From<ErrorKind> for i32 {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::PermissionDenied => libc::EPERM,
            ErrorKind::FileNotFound => libc::ENOENT,
            ErrorKind::InterruptedSystemCall => libc::EINTR,
            ErrorKind::InputOutputError => libc::EIO,
            ErrorKind::BadFileDescriptor => libc::EBADF,
            ErrorKind::FileExists => libc::EEXIST,
            ErrorKind::NotADirectory => libc::ENOTDIR,
            ErrorKind::IsADirectory => libc::EISDIR,
            ErrorKind::InvalidArgument => libc::EINVAL,
            ErrorKind::NoSpaceLeftOnDevice => libc::ENOSPC,
            ErrorKind::ReadOnlyFileSystem => libc::EROFS,
            ErrorKind::ResultTooLarge => libc::ERANGE,
            ErrorKind::ResourceUnavailableTryAgain => libc::EAGAIN,
            ErrorKind::DirectoryNotEmpty => libc::ENOTEMPTY,
            ErrorKind::StaleFileHandle => libc::ESTALE,
            ErrorKind::FunctionNotImplemented => libc::ENOSYS,
            ErrorKind::NotSupported => libc::ENOTSUP,
            ErrorKind::NoDataAvailable => libc::ENODATA,
            ErrorKind::Unknown(code) => code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_roundtrip() {
        let kinds = [
            ErrorKind::PermissionDenied,
            ErrorKind::FileNotFound,
            ErrorKind::InterruptedSystemCall,
            ErrorKind::InputOutputError,
            ErrorKind::BadFileDescriptor,
            ErrorKind::FileExists,
            ErrorKind::NotADirectory,
            ErrorKind::IsADirectory,
            ErrorKind::InvalidArgument,
            ErrorKind::NoSpaceLeftOnDevice,
            ErrorKind::ReadOnlyFileSystem,
            ErrorKind::ResultTooLarge,
            ErrorKind::ResourceUnavailableTryAgain,
            ErrorKind::DirectoryNotEmpty,
            ErrorKind::StaleFileHandle,
            ErrorKind::FunctionNotImplemented,
            ErrorKind::NotSupported,
            ErrorKind::NoDataAvailable,
        ];
        for kind in kinds {
            let code: i32 = kind.into();
            assert_eq!(kind, ErrorKind::from(code));
        }
    }

    #[test]
    fn display_includes_message() {
        let e = PosixError::not_found("no such permanode");
        assert!(format!("{e}").contains("no such permanode"));
    }
}
