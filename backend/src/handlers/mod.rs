pub mod showplan;
