pub mod domain;
pub mod ports;
pub mod profile;
pub mod session;
pub mod store;

pub use domain::{
    AuthEvent, AvatarFile, Category, CategoryId, NewNote, Note, NoteDraft, NoteId, NoteUpdate,
    Profile, ProfileChanges, User, UserId,
};
pub use ports::{AuthService, DataService, PortError, PortResult, StorageService};
pub use profile::{ProfileError, ProfileService};
pub use session::{SessionProvider, Subscription};
pub use store::{NotesStore, StoreError, StoreOptions, StoreSnapshot};
