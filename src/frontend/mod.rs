pub mod listing;
pub mod parser;
pub mod parser_error;
pub mod token_dumper;
pub mod tokenizer;
