pub mod decision;
pub mod observation;
pub mod run;
