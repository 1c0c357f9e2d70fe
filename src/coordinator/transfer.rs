use crate::manifest::Manifest;

/// The external mechanism that moves backed-up bytes.
///
/// Implementations receive the manifest built for the current invocation and
/// dispatch its groups to whatever helpers they own. State tokens, the data
/// sink and the data source are opaque here and passed through unmodified.
pub trait TransferMechanism {
    /// State recorded after a backup and handed back on the next one.
    type State;
    /// Destination of backed-up data.
    type Sink;
    /// Origin of restored data.
    type Source;
    /// Failure reported by the mechanism.
    type Error;

    /// Serializes the manifest's files and preference sets into `data`.
    fn backup(
        &self,
        manifest: &Manifest,
        previous_state: Option<&Self::State>,
        data: &mut Self::Sink,
        new_state: &mut Self::State,
    ) -> Result<(), Self::Error>;

    /// Restores the manifest's files and preference sets from `data`.
    fn restore(
        &self,
        manifest: &Manifest,
        data: &mut Self::Source,
        app_version_code: u32,
        new_state: &mut Self::State,
    ) -> Result<(), Self::Error>;
}
