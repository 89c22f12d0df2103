//! Pipeline components and their default collaborators

pub mod acoustid_client;
pub mod file_scanner;
pub mod fingerprinter;
pub mod identifier;
pub mod lofty_codec;
pub mod metadata_resolver;
pub mod musicbrainz_client;
pub mod renamer;
pub mod tag_inspector;

pub use acoustid_client::{AcoustIDClient, AcoustIDError, AcoustIdProvider};
pub use file_scanner::{FileScanner, ScanError};
pub use fingerprinter::{Fingerprint, Fingerprinter};
pub use identifier::{rank_candidates, select_best, IdentifyOutcome, Identifier};
pub use lofty_codec::LoftyCodec;
pub use metadata_resolver::MetadataResolver;
pub use musicbrainz_client::{MBError, MusicBrainzClient, MusicBrainzProvider};
pub use renamer::{render_template, sanitize_component, RenameProposal, Renamer};
pub use tag_inspector::{
    merge_updates, normalize_year, passthrough_updates, virtualdj_compat, TagInspector,
    PROCESSED_MARKER,
};
