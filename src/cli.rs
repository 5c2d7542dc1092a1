use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, about = "A utility for evaluating decision cubes")]
pub struct Cli {
  #[arg(short, long, value_name = "FILE", help = "The path to the cube's JSON file")]
  pub input_path: String,

  #[arg(
    short,
    long,
    value_name = "KEY=VALUE",
    help = "A coordinate entry, e.g. `--coordinate age=42`; repeatable"
  )]
  pub coordinate: Vec<String>,

  #[arg(
    short,
    long,
    value_name = "KEY",
    default_value = "return",
    help = "The output map key to print after evaluation"
  )]
  pub output: String,

  #[arg(long, default_value = "default", help = "The application id to evaluate the cube under")]
  pub app_id: String,
}
