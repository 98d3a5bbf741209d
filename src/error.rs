//! Crate-wide error type and the per-thread advisory error trace.

use std::array::TryFromSliceError;
use std::cell::RefCell;
use std::num::TryFromIntError;
use std::str::Utf8Error;

#[derive(Debug)]
pub enum Error {
    InvalidArgument,
    OutOfMemory,

    // protocol / decode errors
    BadMagic,
    UnsupportedVersion,
    InvalidPacket,
    InvalidPacketField,
    UnrecognizedPacketType,
    SerializeBadClassUid,
    SerializeBadMagicNumber,
    SerializeBadVersion,
    SerializeUnexpectedBytes,
    SerializeUnrecognizedClass,
    SerializeBadSuperClass,
    SerializeBadHandle,
    SerializeStringTooBig,
    SerializeStringContainsNull,

    // value-space errors
    PropertyWrongValueType,
    InvalidTypeConversion,
    TypeConversionOutOfBounds,
    StringNotNumber,
    NumberNotU16,
    NullString,

    // map errors
    NotFound,
    HashValueAlreadyExists,
    InvalidIterator,

    // transport errors
    ConnectionClosed,
    AlreadyConnected,
    InvalidPort,
    SocketConnectFailed,
    SocketReadFailed,
    SocketWriteFailed,
    SocketShutdownFailed,
    SocketCloseFailed,
    TimeoutExpired,
    PollError,

    // TLS errors
    SslInitError,
    SslCertError,
    SslAlreadyInitialised,
    SslNotInitialised,

    // port-mapper errors
    PortMapperInvalidInput,
    PortMapperWrongVersion,
    PortMapperError,

    Io(std::io::Error),
    Utf8Error(Utf8Error),
    TryFromSliceError(TryFromSliceError),
    TryFromIntError(TryFromIntError),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TimeoutExpired => write!(f, "operation timed out before completion"),
            Self::ConnectionClosed => write!(f, "the peer closed the connection"),
            Self::PortMapperWrongVersion => write!(f, "port mapper reported an unsupported version"),
            Self::BadMagic => write!(f, "packet magic number did not match"),
            Self::UnsupportedVersion => write!(f, "packet version is not supported"),
            Self::Io(err) => write!(f, "io error: {err}"),
            _ => write!(f, "{:?}", self),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<Utf8Error> for Error {
    fn from(value: Utf8Error) -> Self {
        Self::Utf8Error(value)
    }
}

impl From<TryFromSliceError> for Error {
    fn from(value: TryFromSliceError) -> Self {
        Self::TryFromSliceError(value)
    }
}

impl From<TryFromIntError> for Error {
    fn from(value: TryFromIntError) -> Self {
        Self::TryFromIntError(value)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// One entry appended to the per-thread [`ErrorTrace`] as an error bubbles up.
#[derive(Debug, Clone)]
pub struct TraceEntry {
    pub method: &'static str,
    pub file: &'static str,
    pub line: u32,
    pub message: Option<String>,
}

thread_local! {
    static TRACE: RefCell<Vec<TraceEntry>> = const { RefCell::new(Vec::new()) };
}

/// Advisory, per-thread diagnostic trail. Never consulted for control flow;
/// appending to it never fails in a way that aborts the caller.
pub struct ErrorTrace;

impl ErrorTrace {
    pub fn push(entry: TraceEntry) {
        TRACE.with(|trace| trace.borrow_mut().push(entry));
    }

    /// Drain and return every entry recorded on the current thread so far.
    pub fn take() -> Vec<TraceEntry> {
        TRACE.with(|trace| trace.borrow_mut().drain(..).collect())
    }

    pub fn clear() {
        TRACE.with(|trace| trace.borrow_mut().clear());
    }
}

/// Records the call site into the current thread's [`ErrorTrace`] and
/// returns the given error, for use as `return Err(trace!(Error::NotFound))`.
#[macro_export]
macro_rules! trace_error {
    ($err:expr) => {{
        let err = $err;
        $crate::error::ErrorTrace::push($crate::error::TraceEntry {
            method: {
                fn f() {}
                fn type_name_of<T>(_: T) -> &'static str {
                    std::any::type_name::<T>()
                }
                type_name_of(f)
            },
            file: file!(),
            line: line!(),
            message: Some(format!("{err}")),
        });
        err
    }};
}
