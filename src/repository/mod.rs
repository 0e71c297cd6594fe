mod request_repository;

pub use request_repository::RequestRepository;
