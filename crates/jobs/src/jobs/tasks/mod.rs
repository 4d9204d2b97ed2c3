//! One module per job type: typed parameters, the task, and its encoder.

mod add_comic;
mod convert_comic;
mod delete_comic;
mod move_comic;
mod process_comic;
mod rescan_comic;
mod undelete_comic;

pub use add_comic::{AddComicEncoder, AddComicParams, AddComicTask};
pub use convert_comic::{ConvertComicEncoder, ConvertComicParams, ConvertComicTask};
pub use delete_comic::{DeleteComicEncoder, DeleteComicParams, DeleteComicTask};
pub use move_comic::{MoveComicEncoder, MoveComicParams, MoveComicTask};
pub use process_comic::{ProcessComicEncoder, ProcessComicParams, ProcessComicTask};
pub use rescan_comic::{RescanComicEncoder, RescanComicParams, RescanComicTask};
pub use undelete_comic::{UndeleteComicEncoder, UndeleteComicParams, UndeleteComicTask};
