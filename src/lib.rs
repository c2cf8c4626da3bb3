#[macro_export]
macro_rules! debug_log {
	($($arg:tt)*) => {{
		#[cfg(debug_assertions)]
		{
			tracing::debug!($($arg)*);
		}
	}};
}

pub mod ast;
pub mod checker;
pub mod collector;
pub mod config;
pub mod error;
pub mod facade;
pub mod file;
pub mod kind;
pub mod lookup;
pub mod mutate;
pub mod package;
pub mod parser;
pub mod position;
pub mod printer;
pub mod program;
pub mod scanner;
pub mod struct_field;
pub mod tags;
pub mod tools;
pub mod types;

pub use error::{Error, Result};
pub use facade::{DeclId, Facade, FacadeMut};
pub use file::{File, FileId, Import};
pub use kind::{ObjKind, ObjKinds, TypKind, TypKinds};
pub use lookup::TypeLookup;
pub use package::{Package, PackageId};
pub use program::{LoadOptions, Program, Scope};
pub use struct_field::{FieldMut, FieldRef, TagsMut};
pub use tags::{Tag, TagError, Tags};
pub use types::{BasicInfo, BasicKind, ChanDir, Ty};
