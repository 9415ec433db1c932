use analysis::handler::AnalysisKind;
use lambda_runtime::Error;

#[tokio::main]
async fn main() -> Result<(), Error> {
    opportunity_functions::serve(AnalysisKind::Capability).await
}
