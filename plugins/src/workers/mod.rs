mod echo;

pub use echo::EchoWorker;
