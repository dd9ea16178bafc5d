pub mod applications;
pub mod leads;
pub mod sign_in;
