/// Classification for retry policy.
///
/// Used by the batch price fetcher and the renewal scheduler to decide how to
/// react to an error returned by a provider adapter.
///
/// # Behavior Summary
///
/// | Class | Split batch? | Abort cycle? | Retried by |
/// |-------|--------------|--------------|------------|
/// | `PerItem` | Yes | No | the batch fetcher, one request per item |
/// | `NextCycle` | No | Yes | the scheduler, on its next tick |
/// | `Never` | No | Yes | nobody, the request is invalid |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// The provider rejected the whole request because one of its members was
    /// invalid. Re-issue the request once per member and skip the members that
    /// still fail.
    PerItem,

    /// Transient failure (provider down, throttled, cancelled).
    /// The current cycle gives up and the scheduler tries again on its next tick.
    NextCycle,

    /// Permanent failure - unsupported service, unknown provider, bad config.
    /// Retrying won't help.
    Never,
}
