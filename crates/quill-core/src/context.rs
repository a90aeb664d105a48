//! The query context seen by places and providers.

/// A per-query description of where completion was requested.
///
/// The engine treats the context as opaque. The only thing it requires is a
/// stable position that places can inspect; everything else (document text,
/// scopes, expected types) belongs to the implementing type.
///
/// Contexts are shared by reference with every place and provider evaluated
/// during a dispatch, possibly across await points, hence the `Send + Sync`
/// bound.
pub trait QueryContext: Send + Sync {
    /// The position type, e.g. a byte offset or a syntax node.
    type Position: ?Sized;

    /// Returns the position the query was made at.
    fn position(&self) -> &Self::Position;
}
