use hatchery::error::AppResult;

fn main() -> AppResult<()> {
    hatchery::entry::run()
}
