pub mod fisher;
pub mod variant_call;
