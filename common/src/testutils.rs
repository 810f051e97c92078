#[cfg(test)]
pub fn create_temp_dir() -> anyhow::Result<std::path::PathBuf> {
    let mut idx = 0;
    loop {
        let tmp_dir = std::env::temp_dir().join(format!("rfs_test{}", &idx));
        if let Err(error) = std::fs::create_dir(&tmp_dir) {
            match error.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    idx += 1;
                }
                _ => return Err(error.into()),
            }
        } else {
            return Ok(tmp_dir);
        }
    }
}

#[cfg(test)]
pub fn setup_test_dir() -> anyhow::Result<std::path::PathBuf> {
    // create a temporary directory
    let tmp_dir = create_temp_dir()?;
    // foo
    // |- 0.txt
    // |- bar
    //    |- 1.txt
    //    |- 2.txt
    //    |- 3.txt
    // |- baz
    //    |- 4.txt
    //    |- 5.txt
    let foo_path = tmp_dir.join("foo");
    std::fs::create_dir(&foo_path)?;
    std::fs::write(foo_path.join("0.txt"), "0")?;
    let bar_path = foo_path.join("bar");
    std::fs::create_dir(&bar_path)?;
    std::fs::write(bar_path.join("1.txt"), "1")?;
    std::fs::write(bar_path.join("2.txt"), "2")?;
    std::fs::write(bar_path.join("3.txt"), "3")?;
    let baz_path = foo_path.join("baz");
    std::fs::create_dir(&baz_path)?;
    std::fs::write(baz_path.join("4.txt"), "4")?;
    std::fs::write(baz_path.join("5.txt"), "5")?;
    Ok(tmp_dir)
}
