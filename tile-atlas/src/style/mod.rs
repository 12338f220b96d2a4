//! Style-facing image model: the records supplied by the image management
//! collaborator and the variant keys under which they are requested.

pub mod image;
