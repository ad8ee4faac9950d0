mod adam;
mod gradient_descent;
mod gradient_descent_with_momentum;
mod learning_rate;
mod optimizer;
mod spec;

pub use adam::Adam;
pub use gradient_descent::GradientDescent;
pub use gradient_descent_with_momentum::GradientDescentWithMomentum;
pub use learning_rate::LearningRate;
pub use optimizer::Optimizer;
pub use spec::OptimizerSpec;
