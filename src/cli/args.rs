use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "fuzzai",
    version,
    about = "concurrent HTTP content-discovery fuzzer",
    long_about = "fuzzai substitutes every wordlist entry into a URL template and reports the responses that survive the configured filters.\n\nExamples:\n  fuzzai -u https://target.tld/FUZZ -w words.txt\n  fuzzai -u https://target.tld/FUZZ -w words.txt -t 50 --fc 404 --fs 0\n  fuzzai -u https://FUZZ.target.tld/ -w subs.txt --mc 200-299 -o hits.json\n  fuzzai -u https://target.tld/login -X POST -d 'user=admin&pass=FUZZ' ...\n\nTip: Use --config to persist settings and keep CLI invocations short."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "vb",
        visible_alias = "verbose",
        action = ArgAction::Count,
        help_heading = "Output",
        help = "Increase verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        short = 'u',
        long = "u",
        visible_alias = "url",
        value_name = "URL",
        help_heading = "Input",
        help = "Target URL template containing the placeholder (e.g. https://target.tld/FUZZ)."
    )]
    pub url: Option<String>,

    #[arg(
        short = 'w',
        long = "wl",
        visible_alias = "wordlist",
        value_name = "FILE",
        help_heading = "Input",
        help = "Wordlist file path (one candidate per line)."
    )]
    pub wordlist: Option<String>,

    #[arg(
        long = "ph",
        visible_alias = "placeholder",
        value_name = "TOKEN",
        help_heading = "Input",
        help = "Placeholder token replaced by each candidate (default FUZZ)."
    )]
    pub placeholder: Option<String>,

    #[arg(
        short = 'C',
        long = "cfg",
        visible_alias = "config",
        value_name = "FILE",
        help_heading = "Input",
        help = "Load settings from a YAML file ('default' means ~/.fuzzai/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        long = "ic",
        visible_alias = "init-config",
        help_heading = "Input",
        help = "Write a commented default config to ~/.fuzzai/config.yml and exit."
    )]
    pub init_config: bool,

    #[arg(
        short = 't',
        long = "th",
        visible_aliases = ["threads", "concurrency"],
        value_name = "N",
        help_heading = "Performance",
        help = "Number of concurrent workers (default 10)."
    )]
    pub concurrency: Option<usize>,

    #[arg(
        short = 'T',
        long = "to",
        visible_alias = "timeout",
        value_name = "SECONDS",
        help_heading = "Performance",
        help = "Per-request timeout in seconds (default 10)."
    )]
    pub timeout: Option<u64>,

    #[arg(
        short = 'p',
        long = "dl",
        visible_alias = "delay",
        value_name = "SECONDS",
        help_heading = "Performance",
        help = "Delay each worker waits after a request (e.g. 0.1)."
    )]
    pub delay: Option<f64>,

    #[arg(
        short = 'r',
        long = "rt",
        visible_alias = "rate",
        value_name = "RPS",
        help_heading = "Performance",
        help = "Request rate limit in requests per second (0 = unlimited)."
    )]
    pub rate: Option<u32>,

    #[arg(
        long = "mt",
        visible_alias = "max-time",
        value_name = "SECONDS",
        help_heading = "Performance",
        help = "Stop pulling new candidates after this many seconds."
    )]
    pub max_time: Option<u64>,

    #[arg(
        short = 'X',
        long = "mth",
        visible_alias = "method",
        value_name = "METHOD",
        help_heading = "HTTP",
        help = "HTTP method (default GET)."
    )]
    pub method: Option<String>,

    #[arg(
        short = 'H',
        long = "hdr",
        visible_alias = "header",
        value_name = "HEADER",
        action = ArgAction::Append,
        help_heading = "HTTP",
        help = "Add a header to all requests (format: 'Key: Value', repeatable)."
    )]
    pub headers: Vec<String>,

    #[arg(
        short = 'd',
        long = "dt",
        visible_alias = "data",
        value_name = "BODY",
        help_heading = "HTTP",
        help = "Request body; the placeholder is substituted here too."
    )]
    pub data: Option<String>,

    #[arg(
        short = 'k',
        long = "ins",
        visible_alias = "insecure",
        help_heading = "HTTP",
        help = "Skip TLS certificate and hostname verification."
    )]
    pub insecure: bool,

    #[arg(
        short = 'F',
        long = "frd",
        visible_alias = "follow-redirects",
        help_heading = "HTTP",
        help = "Follow HTTP redirects."
    )]
    pub follow_redirects: bool,

    #[arg(
        short = 'x',
        long = "px",
        visible_alias = "proxy",
        value_name = "URL",
        help_heading = "HTTP",
        help = "Proxy URL for all requests (e.g. http://127.0.0.1:8080)."
    )]
    pub proxy: Option<String>,

    #[arg(
        long = "fc",
        visible_alias = "filter-status",
        value_name = "SET",
        help_heading = "Filters",
        help = "Drop responses with these status codes (e.g. 404,500-599)."
    )]
    pub filter_status: Option<String>,

    #[arg(
        long = "fs",
        visible_alias = "filter-size",
        value_name = "SET",
        help_heading = "Filters",
        help = "Drop responses with these body sizes in bytes (e.g. 0,1234-1300)."
    )]
    pub filter_size: Option<String>,

    #[arg(
        long = "fl",
        visible_alias = "filter-lines",
        value_name = "SET",
        help_heading = "Filters",
        help = "Drop responses with these line counts."
    )]
    pub filter_lines: Option<String>,

    #[arg(
        long = "fw",
        visible_alias = "filter-words",
        value_name = "SET",
        help_heading = "Filters",
        help = "Drop responses with these word counts."
    )]
    pub filter_words: Option<String>,

    #[arg(
        long = "fe",
        visible_alias = "filter-errors",
        value_name = "KINDS",
        help_heading = "Filters",
        help = "Drop failed requests of these kinds (refused,reset,dns,timeout,tls,malformed,invalid-request,other or all)."
    )]
    pub filter_errors: Option<String>,

    #[arg(
        long = "mc",
        visible_alias = "match-status",
        value_name = "SET",
        help_heading = "Matchers",
        help = "Keep only responses with these status codes (e.g. 200,301-302)."
    )]
    pub match_status: Option<String>,

    #[arg(
        long = "ms",
        visible_alias = "match-size",
        value_name = "SET",
        help_heading = "Matchers",
        help = "Keep only responses with these body sizes."
    )]
    pub match_size: Option<String>,

    #[arg(
        long = "ml",
        visible_alias = "match-lines",
        value_name = "SET",
        help_heading = "Matchers",
        help = "Keep only responses with these line counts."
    )]
    pub match_lines: Option<String>,

    #[arg(
        long = "mw",
        visible_alias = "match-words",
        value_name = "SET",
        help_heading = "Matchers",
        help = "Keep only responses with these word counts."
    )]
    pub match_words: Option<String>,

    #[arg(
        short = 'o',
        long = "out",
        visible_alias = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Write kept results to a file after the run."
    )]
    pub output: Option<String>,

    #[arg(
        long = "of",
        visible_alias = "output-format",
        value_name = "FORMAT",
        help_heading = "Output",
        help = "Output format (text, json, xml, csv); inferred from the file extension when omitted."
    )]
    pub output_format: Option<String>,

    #[arg(
        short = 'n',
        long = "nc",
        visible_alias = "no-color",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,
}
