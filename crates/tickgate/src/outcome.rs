/// The result of running one work item.
///
/// Exactly one `Outcome` is produced for every item that reaches its work
/// invocation. The error side belongs to the work function; the pool never
/// injects errors of its own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome<T, P, E> {
    /// The item this outcome was produced for.
    pub item: T,
    /// Payload on success, the work function's error otherwise.
    pub result: Result<P, E>,
}

impl<T, P, E> Outcome<T, P, E> {
    pub const fn new(item: T, result: Result<P, E>) -> Self {
        Self { item, result }
    }

    pub const fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub const fn is_err(&self) -> bool {
        self.result.is_err()
    }

    pub fn payload(&self) -> Option<&P> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&E> {
        self.result.as_ref().err()
    }

    pub fn into_parts(self) -> (T, Result<P, E>) {
        (self.item, self.result)
    }
}
